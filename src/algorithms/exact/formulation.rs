//! Exact slotting formulation.
//!
//! Builds the binary program whose optimum is a cost-minimal slotting:
//!
//! * `x[k][r]`: product `k` sits in interior rack `r`. Boundary racks hold
//!   no products here, they are the route's start and end.
//! * `y[f][r]`, `a[f][r]`, `b[f][r]`: circuit `f` has its window over,
//!   starts at, ends at rack `r`. With `A(r)` the prefix sum of `a` up to
//!   `r` and `B(r)` the prefix sum of `b` strictly before `r`, the window is
//!   pinned by `y <= A`, `y <= 1 - B` and `y >= A - B`.
//! * Windows of different circuits may only touch at an end rack: at most
//!   one window spans each gap between neighbouring racks, and a rack a
//!   window passes strictly through belongs to that circuit alone.
//! * `v[o][s]`, `z[o][i][j]`: order `o` stops at `s`; its route walks from
//!   node `i` to node `j`. Nodes are the start boundary, the stops in
//!   ascending rack order, and the end boundary; arcs only go forward and
//!   in/out degree equals `v` at every stop.
//!
//! A stop is a single rack ([`RouteGranularity::Rack`], the default) or a
//! whole aisle ([`RouteGranularity::Aisle`]). Visiting a stop costs the walk
//! along its racks; moving between stops costs the distance from the last
//! rack of one to the first rack of the next. At rack granularity the
//! objective is exactly [`total_cost`] of the encoded placement, so its
//! optimum is a cost-minimal slotting. The aisle model is smaller but
//! charges every visited aisle end to end.

use super::model::{ConstraintKind, LinearExpr, Model, Node, Sense, VarId, VarKey};
use crate::models::{
    AisleId, CircuitId, Cost, ObjectiveKind, ProductId, RackId, Solution, WarehouseInstance,
};
use crate::utils::cost::{path_cost, total_cost};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Unit an order's route is modelled in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteGranularity {
    /// One node per aisle; visiting an aisle walks all of it, so the
    /// objective only bounds the travel cost from above
    Aisle,
    /// One node per interior rack; matches the cost evaluator exactly
    #[default]
    Rack,
}

impl fmt::Display for RouteGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteGranularity::Aisle => write!(f, "aisle"),
            RouteGranularity::Rack => write!(f, "rack"),
        }
    }
}

impl FromStr for RouteGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aisle" => Ok(RouteGranularity::Aisle),
            "rack" => Ok(RouteGranularity::Rack),
            other => Err(format!("unknown route granularity {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulationError {
    #[error("solution has {actual} products, model expects {expected}")]
    ProductCount { expected: usize, actual: usize },

    #[error("product {product} is in rack {rack}, which carries no assignment variable")]
    NotAssignable { product: ProductId, rack: RackId },

    #[error("valuation has {actual} values, model has {expected} variables")]
    ValuationSize { expected: usize, actual: usize },

    #[error("product {product} is not assigned to any rack")]
    Unassigned { product: ProductId },
}

/// A route node between the boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    /// Aisle the stop stands for, `None` for a stand-alone rack
    pub aisle: Option<AisleId>,

    /// Interior racks of the stop in ascending order
    pub racks: Vec<RackId>,

    /// Cost of walking the stop from its first to its last rack
    pub intra_cost: Cost,
}

impl Stop {
    pub fn first(&self) -> RackId {
        self.racks[0]
    }

    pub fn last(&self) -> RackId {
        self.racks[self.racks.len() - 1]
    }
}

/// Built model plus the index structures needed to translate between
/// placements and valuations
#[derive(Debug, Clone)]
pub struct Formulation {
    pub model: Model,
    pub granularity: RouteGranularity,
    pub stops: Vec<Stop>,
    /// Interior racks in ascending order
    slots: Vec<RackId>,
    circuits: BTreeMap<CircuitId, Vec<ProductId>>,
    stop_of_rack: Vec<Option<usize>>,
}

/// Builds the exact model of an instance
pub fn build(instance: &WarehouseInstance, granularity: RouteGranularity) -> Formulation {
    Formulation::build(instance, granularity)
}

impl Formulation {
    pub fn build(instance: &WarehouseInstance, granularity: RouteGranularity) -> Self {
        let slots: Vec<RackId> = (0..instance.num_racks())
            .filter(|&r| !instance.is_boundary(r))
            .collect();
        let stops = build_stops(instance, &slots, granularity);
        let mut stop_of_rack = vec![None; instance.num_racks()];
        for (index, stop) in stops.iter().enumerate() {
            for &rack in &stop.racks {
                stop_of_rack[rack] = Some(index);
            }
        }

        let mut formulation = Self {
            model: Model::new(format!("{}_{}", instance.name, granularity)),
            granularity,
            stops,
            slots,
            circuits: instance.circuits(),
            stop_of_rack,
        };
        formulation.add_assignment(instance);
        formulation.add_contiguity();
        formulation.add_routes(instance);

        debug!(
            variables = formulation.model.num_variables(),
            constraints = formulation.model.num_constraints(),
            stops = formulation.stops.len(),
            "exact model built"
        );
        formulation
    }

    fn assign(&mut self, product: ProductId, rack: RackId) -> VarId {
        self.model.add_binary(VarKey::Assign { product, rack })
    }

    /// Placement, rack capacity and aisle aeration
    fn add_assignment(&mut self, instance: &WarehouseInstance) {
        let slots = self.slots.clone();
        for product in 0..instance.num_products() {
            let mut expr = LinearExpr::new();
            for &rack in &slots {
                expr.add(self.assign(product, rack), 1.0);
            }
            self.model
                .add_constraint(ConstraintKind::AssignOnce { product }, expr, Sense::Eq, 1.0);
        }

        for &rack in &slots {
            let mut expr = LinearExpr::new();
            for product in 0..instance.num_products() {
                expr.add(self.assign(product, rack), 1.0);
            }
            self.model.add_constraint(
                ConstraintKind::RackCapacity { rack },
                expr,
                Sense::Le,
                f64::from(instance.capacity(rack)),
            );
        }

        for aisle in &instance.aisles {
            let mut expr = LinearExpr::new();
            for &rack in aisle.racks.iter().filter(|&&r| !instance.is_boundary(r)) {
                for product in 0..instance.num_products() {
                    expr.add(self.assign(product, rack), 1.0);
                }
            }
            // Products on boundary racks are excluded above, they count as empty
            self.model.add_constraint(
                ConstraintKind::AisleAeration { aisle: aisle.id },
                expr,
                Sense::Le,
                instance.max_fill(aisle) as f64,
            );
        }
    }

    /// Prefix-sum windows and their pairwise separation
    fn add_contiguity(&mut self) {
        let slots = self.slots.clone();
        let circuits: Vec<(CircuitId, Vec<ProductId>)> = self
            .circuits
            .iter()
            .map(|(&c, products)| (c, products.clone()))
            .collect();
        let num_circuits = circuits.len();

        let mut uses: BTreeMap<CircuitId, Vec<VarId>> = BTreeMap::new();
        let mut starts: BTreeMap<CircuitId, Vec<VarId>> = BTreeMap::new();
        let mut ends: BTreeMap<CircuitId, Vec<VarId>> = BTreeMap::new();

        for (circuit, products) in &circuits {
            let circuit = *circuit;
            let y: Vec<VarId> = slots
                .iter()
                .map(|&rack| self.model.add_binary(VarKey::FamilyUses { circuit, rack }))
                .collect();
            let a: Vec<VarId> = slots
                .iter()
                .map(|&rack| self.model.add_binary(VarKey::FamilyStart { circuit, rack }))
                .collect();
            let b: Vec<VarId> = slots
                .iter()
                .map(|&rack| self.model.add_binary(VarKey::FamilyEnd { circuit, rack }))
                .collect();

            for &product in products {
                for (index, &rack) in slots.iter().enumerate() {
                    let x = self.assign(product, rack);
                    self.model.add_constraint(
                        ConstraintKind::UsesLink { product, rack },
                        LinearExpr::new().with(y[index], 1.0).with(x, -1.0),
                        Sense::Ge,
                        0.0,
                    );
                }
            }

            let mut one_start = LinearExpr::new();
            let mut one_end = LinearExpr::new();
            let mut order = LinearExpr::new();
            for index in 0..slots.len() {
                one_start.add(a[index], 1.0);
                one_end.add(b[index], 1.0);
                if index > 0 {
                    order.add(b[index], index as f64).add(a[index], -(index as f64));
                }
            }
            self.model
                .add_constraint(ConstraintKind::OneStart { circuit }, one_start, Sense::Eq, 1.0);
            self.model
                .add_constraint(ConstraintKind::OneEnd { circuit }, one_end, Sense::Eq, 1.0);
            self.model
                .add_constraint(ConstraintKind::WindowOrder { circuit }, order, Sense::Ge, 0.0);

            for (index, &rack) in slots.iter().enumerate() {
                // y - A(r) <= 0
                let mut not_before = LinearExpr::new().with(y[index], 1.0);
                // y + B(r) <= 1
                let mut not_after = LinearExpr::new().with(y[index], 1.0);
                // y - A(r) + B(r) >= 0
                let mut inside = LinearExpr::new().with(y[index], 1.0);
                for t in 0..=index {
                    not_before.add(a[t], -1.0);
                    inside.add(a[t], -1.0);
                }
                for t in 0..index {
                    not_after.add(b[t], 1.0);
                    inside.add(b[t], 1.0);
                }
                self.model.add_constraint(
                    ConstraintKind::NotBeforeStart { circuit, rack },
                    not_before,
                    Sense::Le,
                    0.0,
                );
                self.model.add_constraint(
                    ConstraintKind::NotAfterEnd { circuit, rack },
                    not_after,
                    Sense::Le,
                    1.0,
                );
                self.model.add_constraint(
                    ConstraintKind::InsideWindow { circuit, rack },
                    inside,
                    Sense::Ge,
                    0.0,
                );
            }

            uses.insert(circuit, y);
            starts.insert(circuit, a);
            ends.insert(circuit, b);
        }

        if num_circuits < 2 {
            return;
        }

        // cover_f(t) = sum_{u <= t} (a[f][u] - b[f][u]) is 1 iff the window of
        // f spans the gap between slot t and slot t + 1
        let cover = |expr: &mut LinearExpr, circuit: CircuitId, upto: usize, weight: f64| {
            for u in 0..=upto {
                expr.add(starts[&circuit][u], weight);
                expr.add(ends[&circuit][u], -weight);
            }
        };

        for index in 0..slots.len().saturating_sub(1) {
            let mut expr = LinearExpr::new();
            for (circuit, _) in &circuits {
                cover(&mut expr, *circuit, index, 1.0);
            }
            self.model.add_constraint(
                ConstraintKind::EdgeCover { rack: slots[index] },
                expr,
                Sense::Le,
                1.0,
            );
        }

        let big_m = (num_circuits - 1) as f64;
        for index in 1..slots.len().saturating_sub(1) {
            let rack = slots[index];
            for (circuit, _) in &circuits {
                let circuit = *circuit;
                let mut expr = LinearExpr::new();
                for (other, _) in &circuits {
                    if *other != circuit {
                        expr.add(uses[other][index], 1.0);
                    }
                }
                // cover(index - 1) + cover(index), one term per variable
                cover(&mut expr, circuit, index - 1, 2.0 * big_m);
                expr.add(starts[&circuit][index], big_m);
                expr.add(ends[&circuit][index], -big_m);
                self.model.add_constraint(
                    ConstraintKind::PassThrough { circuit, rack },
                    expr,
                    Sense::Le,
                    2.0 * big_m,
                );
            }
        }
    }

    /// Visit indicators, forward path flow and the travel-cost objective
    fn add_routes(&mut self, instance: &WarehouseInstance) {
        let distances = &instance.distances;
        let start = instance.start_rack();
        let end = instance.end_rack();
        let num_stops = self.stops.len();

        let mut nodes = Vec::with_capacity(num_stops + 2);
        nodes.push(Node::Start);
        nodes.extend((0..num_stops).map(Node::Stop));
        nodes.push(Node::End);

        let entry = |node: Node, stops: &[Stop]| match node {
            Node::Start => start,
            Node::Stop(s) => stops[s].first(),
            Node::End => end,
        };
        let exit = |node: Node, stops: &[Stop]| match node {
            Node::Start => start,
            Node::Stop(s) => stops[s].last(),
            Node::End => end,
        };

        for order in &instance.orders {
            let o = order.id;
            let products = order.distinct_products();

            let visits: Vec<VarId> = (0..num_stops)
                .map(|stop| self.model.add_binary(VarKey::Visits { order: o, stop }))
                .collect();
            for (stop, &v) in visits.iter().enumerate() {
                let racks = self.stops[stop].racks.clone();
                let mut upper = LinearExpr::new().with(v, 1.0);
                for &product in &products {
                    for &rack in &racks {
                        let x = self.assign(product, rack);
                        self.model.add_constraint(
                            ConstraintKind::VisitLink {
                                order: o,
                                product,
                                rack,
                            },
                            LinearExpr::new().with(v, 1.0).with(x, -1.0),
                            Sense::Ge,
                            0.0,
                        );
                        upper.add(x, -1.0);
                    }
                }
                self.model.add_constraint(
                    ConstraintKind::VisitUpper { order: o, stop },
                    upper,
                    Sense::Le,
                    0.0,
                );
                let intra = self.stops[stop].intra_cost;
                self.model.add_objective_term(v, intra as f64);
            }

            let mut inflow: Vec<LinearExpr> = vec![LinearExpr::new(); nodes.len()];
            let mut outflow: Vec<LinearExpr> = vec![LinearExpr::new(); nodes.len()];
            for i in 0..nodes.len() {
                for j in (i + 1)..nodes.len() {
                    let (from, to) = (nodes[i], nodes[j]);
                    let z = self.model.add_binary(VarKey::Segment { order: o, from, to });
                    outflow[i].add(z, 1.0);
                    inflow[j].add(z, 1.0);
                    let leg = distances.get(exit(from, &self.stops), entry(to, &self.stops));
                    self.model.add_objective_term(z, leg as f64);
                }
            }

            let last = nodes.len() - 1;
            self.model.add_constraint(
                ConstraintKind::LeaveStart { order: o },
                std::mem::take(&mut outflow[0]),
                Sense::Eq,
                1.0,
            );
            self.model.add_constraint(
                ConstraintKind::EnterEnd { order: o },
                std::mem::take(&mut inflow[last]),
                Sense::Eq,
                1.0,
            );
            for stop in 0..num_stops {
                let node = stop + 1;
                let incoming = std::mem::take(&mut inflow[node]).with(visits[stop], -1.0);
                let outgoing = std::mem::take(&mut outflow[node]).with(visits[stop], -1.0);
                self.model.add_constraint(
                    ConstraintKind::FlowIn { order: o, stop },
                    incoming,
                    Sense::Eq,
                    0.0,
                );
                self.model.add_constraint(
                    ConstraintKind::FlowOut { order: o, stop },
                    outgoing,
                    Sense::Eq,
                    0.0,
                );
            }
        }
    }

    /// Stop index of a rack, if the rack can hold products
    pub fn stop_of(&self, rack: RackId) -> Option<usize> {
        self.stop_of_rack.get(rack).copied().flatten()
    }

    /// Canonical valuation of a placement: tight circuit windows and the
    /// forward route through every visited stop.
    ///
    /// Fails if the placement uses a boundary rack. Infeasible placements
    /// still encode; [`Model::evaluate`] then reports what they break.
    pub fn encode(
        &self,
        instance: &WarehouseInstance,
        solution: &Solution,
    ) -> Result<Vec<f64>, FormulationError> {
        if solution.num_products() != instance.num_products() {
            return Err(FormulationError::ProductCount {
                expected: instance.num_products(),
                actual: solution.num_products(),
            });
        }

        let mut values = vec![0.0; self.model.num_variables()];
        let mut set = |key: VarKey| -> bool {
            match self.model.var(&key) {
                Some(var) => {
                    values[var.0] = 1.0;
                    true
                }
                None => false,
            }
        };

        for (product, &rack) in solution.positions.iter().enumerate() {
            if !set(VarKey::Assign { product, rack }) {
                return Err(FormulationError::NotAssignable { product, rack });
            }
        }

        for (&circuit, products) in &self.circuits {
            let low = products.iter().map(|&p| solution.positions[p]).min();
            let high = products.iter().map(|&p| solution.positions[p]).max();
            if let (Some(low), Some(high)) = (low, high) {
                set(VarKey::FamilyStart { circuit, rack: low });
                set(VarKey::FamilyEnd { circuit, rack: high });
                for &rack in self.slots.iter().filter(|&&r| low <= r && r <= high) {
                    set(VarKey::FamilyUses { circuit, rack });
                }
            }
        }

        for order in &instance.orders {
            let mut visited: Vec<usize> = order
                .products
                .iter()
                .filter_map(|&p| self.stop_of(solution.positions[p]))
                .collect();
            visited.sort_unstable();
            visited.dedup();

            let mut route = vec![Node::Start];
            for &stop in &visited {
                set(VarKey::Visits {
                    order: order.id,
                    stop,
                });
                route.push(Node::Stop(stop));
            }
            route.push(Node::End);
            for leg in route.windows(2) {
                set(VarKey::Segment {
                    order: order.id,
                    from: leg[0],
                    to: leg[1],
                });
            }
        }
        Ok(values)
    }

    /// Reads the placement out of a solver valuation. The objective is the
    /// true travel cost of the placement.
    pub fn decode(
        &self,
        instance: &WarehouseInstance,
        values: &[f64],
    ) -> Result<Solution, FormulationError> {
        if values.len() != self.model.num_variables() {
            return Err(FormulationError::ValuationSize {
                expected: self.model.num_variables(),
                actual: values.len(),
            });
        }

        let mut positions = Vec::with_capacity(instance.num_products());
        for product in 0..instance.num_products() {
            let rack = self
                .slots
                .iter()
                .copied()
                .find(|&rack| {
                    self.model
                        .var(&VarKey::Assign { product, rack })
                        .is_some_and(|var| values[var.0] > 0.5)
                })
                .ok_or(FormulationError::Unassigned { product })?;
            positions.push(rack);
        }

        let cost = total_cost(instance, &positions);
        Ok(Solution::with_positions(
            positions,
            cost,
            ObjectiveKind::TravelCost,
        ))
    }
}

fn build_stops(
    instance: &WarehouseInstance,
    slots: &[RackId],
    granularity: RouteGranularity,
) -> Vec<Stop> {
    let distances = &instance.distances;
    let single = |rack: RackId| Stop {
        aisle: None,
        racks: vec![rack],
        intra_cost: 0,
    };

    let mut stops: Vec<Stop> = match granularity {
        RouteGranularity::Rack => slots.iter().map(|&rack| single(rack)).collect(),
        RouteGranularity::Aisle => {
            let owner = instance.aisle_of_racks();
            let mut stops: Vec<Stop> = instance
                .aisles
                .iter()
                .filter_map(|aisle| {
                    let racks: Vec<RackId> = aisle
                        .sorted_racks()
                        .into_iter()
                        .filter(|&r| !instance.is_boundary(r))
                        .collect();
                    (!racks.is_empty()).then(|| Stop {
                        aisle: Some(aisle.id),
                        intra_cost: path_cost(distances, &racks),
                        racks,
                    })
                })
                .collect();
            // Racks outside every aisle are reachable on their own
            stops.extend(
                slots
                    .iter()
                    .filter(|&&rack| owner[rack].is_none())
                    .map(|&rack| single(rack)),
            );
            stops
        }
    };
    stops.sort_by_key(|stop| (stop.first(), stop.aisle));
    stops
}
