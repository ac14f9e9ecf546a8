pub mod posts;
pub mod profiles;

pub use posts::PostService;
pub use profiles::ProfileService;
