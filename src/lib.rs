pub mod commands;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod paths;
pub mod profiles;
pub mod relocate;
pub mod tracking;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
