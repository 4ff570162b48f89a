pub mod compare_api_version;
