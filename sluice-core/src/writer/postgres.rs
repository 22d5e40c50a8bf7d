use crate::writer::{Context, Dialect, SqlWriter};

#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter {}

impl PostgresSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect(&self) -> &'static Dialect {
        &Dialect::POSTGRES
    }

    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        out.push('$');
        write_integer!(out, context.params.len());
    }
}
