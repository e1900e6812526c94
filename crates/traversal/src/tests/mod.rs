
mod app_tests;
mod locomotion_tests;
