pub mod counts_repo;
pub mod migrations;
pub mod post_repo;
pub mod profile_repo;
