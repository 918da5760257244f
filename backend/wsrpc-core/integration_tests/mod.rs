mod config;
mod session_tests;
