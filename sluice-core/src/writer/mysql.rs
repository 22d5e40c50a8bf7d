use crate::{
    ArrayItems, Field, QueryError, Result, SequenceOp, separated_by,
    writer::{ATOMIC_PRECEDENCE, ConcatPiece, Context, Dialect, SequenceStyle, SqlWriter},
};

/// Writer shared by MySQL and MariaDB, the capability table tells them apart.
#[derive(Debug, Clone, Copy)]
pub struct MySqlSqlWriter {
    dialect: &'static Dialect,
}

impl MySqlSqlWriter {
    pub fn new() -> Self {
        Self {
            dialect: &Dialect::MYSQL,
        }
    }
    pub fn mariadb() -> Self {
        Self {
            dialect: &Dialect::MARIADB,
        }
    }
}

impl Default for MySqlSqlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlWriter for MySqlSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    fn expression_concat_precedence(&self) -> i32 {
        ATOMIC_PRECEDENCE
    }

    fn write_concat(
        &self,
        context: &mut Context,
        out: &mut String,
        pieces: &[ConcatPiece<'_>],
    ) -> Result<()> {
        out.push_str("concat(");
        separated_by(
            out,
            pieces,
            |out, v| match v {
                ConcatPiece::Literal(v) => {
                    self.write_value_string(out, v);
                    Ok(())
                }
                ConcatPiece::Expr(v) => self.write_expression(context, out, v),
            },
            ", ",
        )?;
        out.push(')');
        Ok(())
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
        out.push_str("json_arrayagg(");
        self.write_json_array_item(context, out, items)?;
        out.push(')');
        Ok(())
    }

    fn write_expression_sequence(
        &self,
        context: &mut Context,
        out: &mut String,
        name: &str,
        op: SequenceOp,
    ) -> Result<()> {
        if self.dialect.sequences != SequenceStyle::MariaDb {
            return Err(QueryError::configuration(format!(
                "The {} dialect has no sequences, cannot read `{name}`",
                self.dialect.name
            )));
        }
        out.push_str(match op {
            SequenceOp::NextValue => "NEXTVAL(",
            SequenceOp::CurrentValue => "LASTVAL(",
        });
        self.write_identifier_quoted(context, out, name);
        out.push(')');
        Ok(())
    }
}
