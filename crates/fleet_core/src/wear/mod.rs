pub mod wear_model;
pub mod wear_params;
