mod binary_op;
mod expr;
mod field;
mod function;
mod ordered;
mod unary_op;

pub use binary_op::*;
pub use expr::*;
pub use field::*;
pub use function::*;
pub use ordered::*;
pub use unary_op::*;
