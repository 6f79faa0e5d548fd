use std::collections::{BTreeMap, HashMap};

use crate::regions::{UNKNOWN, region_for_state};

/// Portion of the hierarchy a drill-down narrows the heatmap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    All,
    Region(&'a str),
    State(&'a str),
}

/// Region → State → Port containment tree, built once from the record set.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    regions: Vec<String>,
    region_states: BTreeMap<String, Vec<String>>,
    state_ports: BTreeMap<String, Vec<String>>,
    state_region: HashMap<String, String>,
    port_state: HashMap<String, String>,
}

impl HierarchyIndex {
    /// `ports` should be the store's sorted port list; states and regions are
    /// sorted here. Ports missing from `port_to_state` land in [`UNKNOWN`].
    pub fn build(
        ports: &[String],
        port_to_state: &HashMap<String, String>,
        state_region_table: &[(&str, &str)],
    ) -> Self {
        let mut state_ports: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut port_state = HashMap::with_capacity(ports.len());
        for port in ports {
            if port_state.contains_key(port) {
                continue;
            }
            let state = port_to_state
                .get(port)
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_owned());
            state_ports
                .entry(state.clone())
                .or_default()
                .push(port.clone());
            port_state.insert(port.clone(), state);
        }
        for ports in state_ports.values_mut() {
            ports.sort();
        }

        let mut region_states: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut state_region = HashMap::with_capacity(state_ports.len());
        for state in state_ports.keys() {
            let region = region_for_state(state_region_table, state).to_owned();
            region_states
                .entry(region.clone())
                .or_default()
                .push(state.clone());
            state_region.insert(state.clone(), region);
        }

        let regions = region_states.keys().cloned().collect();

        Self {
            regions,
            region_states,
            state_ports,
            state_region,
            port_state,
        }
    }

    /// Regions in display order.
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn states_in(&self, region: &str) -> &[String] {
        self.region_states
            .get(region)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ports_in(&self, state: &str) -> &[String] {
        self.state_ports
            .get(state)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn region_of_state(&self, state: &str) -> Option<&str> {
        self.state_region.get(state).map(String::as_str)
    }

    pub fn state_of_port(&self, port: &str) -> Option<&str> {
        self.port_state.get(port).map(String::as_str)
    }

    pub fn contains_region(&self, region: &str) -> bool {
        self.region_states.contains_key(region)
    }

    pub fn contains_state(&self, state: &str) -> bool {
        self.state_ports.contains_key(state)
    }

    pub fn port_count(&self) -> usize {
        self.port_state.len()
    }

    /// Flattened ports inside `scope`, in region → state → port order.
    ///
    /// Unknown regions or states yield an empty list.
    pub fn ports_under(&self, scope: Scope<'_>) -> Vec<&str> {
        match scope {
            Scope::All => self
                .regions
                .iter()
                .flat_map(|region| self.states_in(region))
                .flat_map(|state| self.ports_in(state))
                .map(String::as_str)
                .collect(),
            Scope::Region(region) => self
                .states_in(region)
                .iter()
                .flat_map(|state| self.ports_in(state))
                .map(String::as_str)
                .collect(),
            Scope::State(state) => self.ports_in(state).iter().map(String::as_str).collect(),
        }
    }
}
