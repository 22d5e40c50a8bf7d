use crate::{
    ArrayItems, Field, Result, separated_by,
    writer::{Context, Dialect, SqlWriter},
};

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter {}

impl SqliteSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect(&self) -> &'static Dialect {
        &Dialect::SQLITE
    }

    fn qualify_returning(&self, has_sources: bool) -> bool {
        has_sources
    }

    fn write_json_object(
        &self,
        context: &mut Context,
        out: &mut String,
        fields: &[Field],
    ) -> Result<()> {
        out.push_str("json_object(");
        separated_by(
            out,
            fields,
            |out, v| {
                self.write_value_string(out, &v.property);
                out.push_str(", ");
                self.write_expression(context, out, &v.expr)
            },
            ", ",
        )?;
        out.push(')');
        Ok(())
    }

    fn write_json_array_aggregation(
        &self,
        context: &mut Context,
        out: &mut String,
        items: &ArrayItems,
    ) -> Result<()> {
        out.push_str("json_group_array(");
        self.write_json_array_item(context, out, items)?;
        out.push(')');
        Ok(())
    }
}
