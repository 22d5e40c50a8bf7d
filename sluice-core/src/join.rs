use crate::{Expr, Source};

#[derive(Debug, Clone)]
pub struct Join {
    pub join: JoinType,
    pub source: Source,
    pub on: Option<Expr>,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    #[default]
    Default,
    Inner,
    Left,
    Right,
    Full,
    Cross,
}
