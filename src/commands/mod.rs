// Authorgate Commands
// Admin-facing operations shared by the form and the JSON API

mod settings_form;

pub use settings_form::*;
