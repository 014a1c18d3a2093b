use super::constants::SPEED_OF_LIGHT;
use super::event::{McParticle, SimEvent};
use super::strategy::StrategyCutoffs;

/// Decides which simulated particles should be findable by the generated strategies
pub trait ParticleFilter: Send {
    /// Called once per event before any particle of that event is tested
    fn set_event(&mut self, _event: &SimEvent) {}
    fn passes(&self, particle: &McParticle) -> bool;
}

/// Lets every particle through
#[derive(Debug, Clone, Default)]
pub struct AcceptAllFilter;

impl ParticleFilter for AcceptAllFilter {
    fn passes(&self, _particle: &McParticle) -> bool {
        true
    }
}

/// Perigee parameters of the helix through a particle's production vertex, relative to the z axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelixParams {
    pub pt: f64,
    /// Unsigned distance of closest approach in the x-y plane, mm
    pub dca: f64,
    /// z at the point of closest approach, mm
    pub z0: f64,
}

impl HelixParams {
    /// Returns None for neutral or zero-pT particles, which have no helix
    pub fn new(particle: &McParticle, b_field: f64) -> Option<Self> {
        let pt = particle.pt();
        if particle.charge == 0.0 || pt == 0.0 || b_field == 0.0 {
            return None;
        }
        let [x0, y0, z] = particle.origin;
        let [px, py, pz] = particle.momentum;

        let radius = pt / (SPEED_OF_LIGHT * b_field * particle.charge.abs());
        // q v x B points from the particle to the center of curvature
        let qb_sign = (particle.charge * b_field).signum();
        let xc = x0 + qb_sign * radius * py / pt;
        let yc = y0 - qb_sign * radius * px / pt;
        let center_dist = xc.hypot(yc);
        let dca = (center_dist - radius).abs();

        // Angle swept from the point of closest approach to the vertex, measured around the center
        let (ax, ay) = if center_dist > 0.0 {
            (-xc / center_dist, -yc / center_dist)
        } else {
            // Circle centered on the axis: every point is equally close
            ((x0 - xc) / radius, (y0 - yc) / radius)
        };
        let (bx, by) = ((x0 - xc) / radius, (y0 - yc) / radius);
        let dphi = (ax * by - ay * bx).atan2(ax * bx + ay * by);
        // Positive qB turns clockwise
        let arc_length = -qb_sign * dphi * radius;
        let z0 = z - arc_length * pz / pt;

        Some(Self { pt, dca, z0 })
    }
}

/// The default filter: a particle passes if a strategy with the given cutoffs could find it
#[derive(Debug, Clone)]
pub struct StrategyBasedFilter {
    cutoffs: StrategyCutoffs,
    b_field: f64,
}

impl StrategyBasedFilter {
    pub fn new(cutoffs: &StrategyCutoffs, b_field: f64) -> Self {
        Self {
            cutoffs: cutoffs.clone(),
            b_field,
        }
    }
}

impl ParticleFilter for StrategyBasedFilter {
    fn passes(&self, particle: &McParticle) -> bool {
        match HelixParams::new(particle, self.b_field) {
            Some(helix) => {
                helix.pt >= self.cutoffs.min_pt
                    && helix.dca <= self.cutoffs.max_dca
                    && helix.z0.abs() <= self.cutoffs.max_z0
            }
            None => false,
        }
    }
}
