use std::collections::HashMap;

use uuid::Uuid;

use crate::geo::{Coordinate, distance_m, within_threshold};
use crate::models::area::ServiceArea;
use crate::models::branch::{AvailableRestaurant, Branch};
use crate::models::restaurant::Restaurant;

/// The `k` areas closest to `target`, nearest first.
///
/// Full stable sort: equidistant areas keep their input order. The area set is
/// small and bounded, so this is linearithmic in the number of areas.
pub fn nearest_areas(target: &Coordinate, areas: &[ServiceArea], k: usize) -> Vec<ServiceArea> {
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(f64, &ServiceArea)> = areas
        .iter()
        .map(|area| (distance_m(target, &area.location), area))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    ranked
        .into_iter()
        .take(k)
        .map(|(_, area)| area.clone())
        .collect()
}

/// Like [`nearest_areas`], but areas farther than `radius_m` are dropped
/// before the `k` prefix is taken.
pub fn nearby_areas(
    target: &Coordinate,
    areas: &[ServiceArea],
    radius_m: f64,
    k: usize,
) -> Vec<ServiceArea> {
    let reachable: Vec<ServiceArea> = areas
        .iter()
        .filter(|area| within_threshold(target, &area.location, radius_m))
        .cloned()
        .collect();
    nearest_areas(target, &reachable, k)
}

/// Branches within `radius_m` of `target`, in input order.
pub fn filter_serviceable(target: &Coordinate, branches: &[Branch], radius_m: f64) -> Vec<Branch> {
    branches
        .iter()
        .filter(|branch| within_threshold(target, &branch.location, radius_m))
        .cloned()
        .collect()
}

/// For every restaurant among `branches`, its closest branch to `target`,
/// kept only if that branch is serviceable. Restaurants come back in the
/// order their first branch appears. Branches of restaurants missing from
/// `restaurants` are ignored.
pub fn available_restaurants(
    target: &Coordinate,
    branches: &[Branch],
    restaurants: &HashMap<Uuid, Restaurant>,
    radius_m: f64,
) -> Vec<AvailableRestaurant> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut closest: HashMap<Uuid, (f64, &Branch)> = HashMap::new();

    for branch in branches {
        if !restaurants.contains_key(&branch.restaurant_id) {
            continue;
        }
        let distance = distance_m(target, &branch.location);
        let best = closest.entry(branch.restaurant_id).or_insert_with(|| {
            order.push(branch.restaurant_id);
            (distance, branch)
        });
        if distance < best.0 {
            *best = (distance, branch);
        }
    }

    order
        .into_iter()
        .filter_map(|restaurant_id| {
            let (distance, branch) = closest.get(&restaurant_id)?;
            let restaurant = restaurants.get(&restaurant_id)?;
            (*distance <= radius_m).then(|| AvailableRestaurant {
                restaurant: restaurant.clone(),
                branch: (*branch).clone(),
                distance_m: *distance,
            })
        })
        .collect()
}
