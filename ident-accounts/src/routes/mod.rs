pub mod activate;
pub mod change_email;
pub mod health;
pub mod login;
pub mod me;
pub mod register;
pub mod request_activation;
pub mod reset_password;
pub mod reset_password_confirm;
pub mod set_password;
