pub mod prompts;

pub use prompts::{confirm_deploy, prompt_confirmation};
