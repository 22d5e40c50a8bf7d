mod adapter;
mod as_value;
mod column;
mod compose;
mod error;
mod expression;
mod join;
mod pipeline;
mod pool;
mod record;
mod runner;
mod session;
mod source;
mod statement;
mod table;
mod util;
mod value;
pub mod writer;

pub use adapter::*;
pub use as_value::*;
pub use column::*;
pub use compose::*;
pub use error::*;
pub use expression::*;
pub use join::*;
pub use pipeline::*;
pub use pool::*;
pub use record::*;
pub use runner::*;
pub use session::*;
pub use source::*;
pub use statement::*;
pub use table::*;
pub use util::*;
pub use value::*;
pub use writer::*;
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
