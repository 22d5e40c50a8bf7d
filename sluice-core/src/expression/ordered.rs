use std::borrow::Cow;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    #[default]
    ASC,
    DESC,
}

/// Ordering by one of the projected properties.
#[derive(Debug, Clone)]
pub struct Ordered {
    pub property: Cow<'static, str>,
    pub order: Order,
}
