pub mod audit;
pub mod config;
pub mod context;
pub mod discovery;
pub mod folder;
pub mod naming;
pub mod paths;
pub mod pipeline;
pub mod replicate;
pub mod retention;
pub mod template;
pub mod util;
pub mod warn;
