use crate::{Table, TypeAdapter, Value};
use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    #[default]
    None,
    SqlCall,
    SqlDeleteFromWhere,
    SqlInsertIntoValues,
    SqlJoin,
    SqlReturning,
    SqlSelect,
    SqlSelectFrom,
    SqlSelectGroupBy,
    SqlSelectHaving,
    SqlSelectOrderBy,
    SqlSelectWhere,
    SqlUpdateSet,
    SqlUpdateWhere,
}

/// Table modified by the statement being written, with the qualifiers its
/// new and old values are read through.
#[derive(Debug, Clone)]
pub struct MutationTarget {
    pub table: Table,
    /// Already quoted qualifier of the values after the change.
    pub new_qualifier: Option<String>,
    /// Already quoted qualifier of the values before the change.
    pub old_qualifier: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecursiveFrame {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) in_term: bool,
}

/// State carried while writing one statement.
///
/// Parameters are collected in emission order, the placeholder of a value is
/// its position in `params`.
#[derive(Debug)]
pub struct Context {
    pub fragment: Fragment,
    pub qualify_columns: bool,
    /// Source of the generated aliases.
    pub counter: u32,
    /// Nesting level of the select being written, 0 for the statement itself.
    pub depth: u32,
    pub params: Vec<Value>,
    /// Converts the parameters of expressions declaring no adapter.
    pub adapter: Arc<dyn TypeAdapter>,
    pub target: Option<MutationTarget>,
    pub(crate) recursive: Vec<RecursiveFrame>,
    pub(crate) recursive_counter: u32,
}

impl Context {
    pub fn new(fragment: Fragment, adapter: Arc<dyn TypeAdapter>) -> Self {
        Self {
            fragment,
            qualify_columns: true,
            counter: 0,
            depth: 0,
            params: Vec::new(),
            adapter,
            target: None,
            recursive: Vec::new(),
            recursive_counter: 0,
        }
    }
    pub fn switch_fragment(&mut self, fragment: Fragment) -> ContextUpdater<'_> {
        let previous_fragment = self.fragment;
        let previous_qualify = self.qualify_columns;
        self.fragment = fragment;
        ContextUpdater {
            current: self,
            previous_fragment,
            previous_qualify,
        }
    }
    pub fn next_alias(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}{}", self.counter)
    }
    pub(crate) fn next_recursive_name(&mut self) -> String {
        self.recursive_counter += 1;
        format!("recursive_select_{}", self.recursive_counter)
    }
}

/// Restores the fragment and the column qualification when dropped.
pub struct ContextUpdater<'a> {
    current: &'a mut Context,
    previous_fragment: Fragment,
    previous_qualify: bool,
}

impl Deref for ContextUpdater<'_> {
    type Target = Context;
    fn deref(&self) -> &Context {
        self.current
    }
}

impl DerefMut for ContextUpdater<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.current
    }
}

impl Drop for ContextUpdater<'_> {
    fn drop(&mut self) {
        self.current.fragment = self.previous_fragment;
        self.current.qualify_columns = self.previous_qualify;
    }
}
