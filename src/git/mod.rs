pub mod gateway;

pub use gateway::{GitCli, GitError, VcsGateway};
