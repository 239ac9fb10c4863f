pub mod json_fixtures;
