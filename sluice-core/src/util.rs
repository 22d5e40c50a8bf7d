use crate::Result;

/// Writes every value through `f`, pushing `separator` between two non-empty writes.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) -> Result<()>
where
    F: FnMut(&mut String, T) -> Result<()>,
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v)?;
    }
    Ok(())
}

#[macro_export]
macro_rules! possibly_parenthesized {
    ($buff:ident, $cond:expr, $v:expr) => {
        if $cond {
            $buff.push('(');
            $v;
            $buff.push(')');
        } else {
            $v;
        }
    };
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            &$query[..$crate::floor_char_boundary(&$query, 497)].trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

/// Largest char boundary not exceeding `index`.
pub fn floor_char_boundary(value: &str, index: usize) -> usize {
    if index >= value.len() {
        return value.len();
    }
    let mut index = index;
    while !value.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated() {
        let mut out = String::from("(");
        separated_by(
            &mut out,
            ["a", "", "b"],
            |out, v| {
                out.push_str(v);
                Ok(())
            },
            ", ",
        )
        .unwrap();
        assert_eq!(out, "(a, b");
    }

    #[test]
    fn truncate() {
        let long = "é".repeat(400);
        let printed = format!("{}", truncate_long!(long));
        assert!(printed.ends_with("..."));
        assert!(printed.len() <= 500);
        assert_eq!(format!("{}", truncate_long!("SELECT 1")), "SELECT 1");
    }
}
