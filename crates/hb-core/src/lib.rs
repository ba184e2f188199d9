pub mod capture;
pub mod cookie;
pub mod environment;
pub mod error;
pub mod precheck;
pub mod request;
pub mod test_result;
pub mod value;

pub use capture::*;
pub use cookie::*;
pub use environment::*;
pub use error::*;
pub use precheck::*;
pub use request::*;
pub use test_result::*;
pub use value::*;
