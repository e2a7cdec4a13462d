pub mod certificates;
pub mod driver;
pub mod selectors;
pub mod session;
pub mod vehicles;
pub mod webdriver;

#[cfg(test)]
pub mod mock;

pub use driver::{BrowserDriver, DriverError, DriverFactory};
pub use webdriver::WebDriverFactory;
