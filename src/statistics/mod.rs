pub mod roller;
pub mod validator;
