use std::collections::HashMap;

/// Assigns stable integer ids to unique node names.
///
/// Ids start at the configured base and grow by one for every new name. An id
/// is never reused or renumbered, and there is no way to remove a node.
#[derive(Debug, Clone)]
pub struct NodeStore {
    base: u64,
    ids: HashMap<String, u64>,
    // names[i] belongs to id base + i
    names: Vec<String>,
}

impl NodeStore {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            ids: HashMap::new(),
            names: Vec::new(),
        }
    }

    /// Return the id of `name`, allocating the next free id the first time
    /// the name is seen.
    pub fn add_node(&mut self, name: &str) -> u64 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.next_id();
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        id
    }

    pub fn lookup(&self, name: &str) -> Option<u64> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u64) -> Option<&str> {
        let idx = id.checked_sub(self.base)?;
        self.names.get(idx as usize).map(|s| s.as_str())
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.name(id).is_some()
    }

    /// The id the next new name will receive.
    pub fn next_id(&self) -> u64 {
        self.base + self.names.len() as u64
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(id, name)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        let base = self.base;
        self.names
            .iter()
            .enumerate()
            .map(move |(i, name)| (base + i as u64, name.as_str()))
    }
}
