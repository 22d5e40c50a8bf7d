use crate::{CteSource, QueryError, Result, SelectData};
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    hash::Hash,
    sync::Arc,
};

/// Named common table expression.
pub struct Cte {
    pub name: Cow<'static, str>,
    pub select: Arc<SelectData>,
    /// Named CTEs the select depends on.
    pub withs: WithSet,
}

impl Cte {
    pub(crate) fn new(name: Cow<'static, str>, select: SelectData) -> Arc<Self> {
        let withs = select.withs();
        Arc::new(Self {
            name,
            select: Arc::new(select),
            withs,
        })
    }
    pub fn source(self: &Arc<Self>) -> CteSource {
        CteSource::new(self.clone())
    }
}

impl Debug for Cte {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cte")
            .field("name", &self.name)
            .field("withs", &self.withs)
            .finish()
    }
}

/// Set of CTEs, deduplicated by identity and kept in insertion order.
#[derive(Default, Clone)]
pub struct WithSet(Vec<Arc<Cte>>);

impl WithSet {
    pub fn insert(&mut self, cte: Arc<Cte>) {
        if !self.0.iter().any(|v| Arc::ptr_eq(v, &cte)) {
            self.0.push(cte);
        }
    }
    pub fn extend(&mut self, other: &WithSet) {
        for cte in &other.0 {
            self.insert(cte.clone());
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Cte>> {
        self.0.iter()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Debug for WithSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|v| &v.name))
            .finish()
    }
}

/// Orders `nodes` so that every node comes after its dependencies.
///
/// Ties keep the order of `nodes`, a dependency missing from `nodes` is ignored.
pub fn topological_order<K>(nodes: &[(K, Vec<K>)]) -> Result<Vec<K>>
where
    K: Clone + Eq + Hash + Debug,
{
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Visiting,
        Done,
    }
    fn visit<K: Clone + Eq + Hash + Debug>(
        index: usize,
        nodes: &[(K, Vec<K>)],
        positions: &HashMap<&K, usize>,
        states: &mut Vec<Option<State>>,
        result: &mut Vec<K>,
    ) -> Result<()> {
        match states[index] {
            Some(State::Done) => return Ok(()),
            Some(State::Visiting) => {
                return Err(QueryError::configuration(format!(
                    "Circular dependency involving {:?}",
                    nodes[index].0
                )));
            }
            None => {}
        }
        states[index] = Some(State::Visiting);
        for dependency in &nodes[index].1 {
            if let Some(&position) = positions.get(dependency) {
                visit(position, nodes, positions, states, result)?;
            }
        }
        states[index] = Some(State::Done);
        result.push(nodes[index].0.clone());
        Ok(())
    }
    let positions: HashMap<&K, usize> = nodes.iter().enumerate().map(|(i, v)| (&v.0, i)).collect();
    let mut states = vec![None; nodes.len()];
    let mut result = Vec::with_capacity(nodes.len());
    for index in 0..nodes.len() {
        visit(index, nodes, &positions, &mut states, &mut result)?;
    }
    Ok(result)
}

/// Every CTE reachable from `roots`, dependencies first.
pub(crate) fn collect_ctes(roots: &WithSet) -> Result<Vec<Arc<Cte>>> {
    fn add(all: &mut Vec<Arc<Cte>>, cte: &Arc<Cte>) -> Result<()> {
        match all.iter().find(|v| v.name == cte.name) {
            Some(existing) if !Arc::ptr_eq(existing, cte) => Err(QueryError::configuration(
                format!("Two different queries are named `{}`", cte.name),
            )),
            Some(..) => Ok(()),
            None => {
                all.push(cte.clone());
                Ok(())
            }
        }
    }
    let mut all: Vec<Arc<Cte>> = Vec::new();
    for cte in roots.iter() {
        add(&mut all, cte)?;
    }
    let mut index = 0;
    while index < all.len() {
        let withs = all[index].withs.clone();
        for cte in withs.iter() {
            add(&mut all, cte)?;
        }
        index += 1;
    }
    let nodes: Vec<(String, Vec<String>)> = all
        .iter()
        .map(|v| {
            (
                v.name.to_string(),
                v.withs.iter().map(|d| d.name.to_string()).collect(),
            )
        })
        .collect();
    let order = topological_order(&nodes)?;
    Ok(order
        .iter()
        .filter_map(|name| all.iter().find(|v| v.name == *name).cloned())
        .collect())
}
