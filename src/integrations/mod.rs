pub mod fighters_api;
