pub mod browser;
pub mod webdriver;
pub mod webhook;
