//! Application services. Each operation is one unit of work on the store.

mod pull_request;
mod team;
mod user;

pub use pull_request::PullRequestService;
pub use team::TeamService;
pub use user::UserService;
