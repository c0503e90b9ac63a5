use std::f64::consts::PI;

//------------------------------------------------------------------------------
// Gust
//------------------------------------------------------------------------------

/// Three-phase vertical gust schedule: a quiescent lead-in, an active
/// cosine-ramp phase, and a quiescent settling phase. The active duration is
/// derived from a gust gradient length expressed in chord lengths and the
/// freestream speed.
#[derive(Debug, Clone)]
pub struct Gust {
    pub peak: f64,    // Peak vertical gust velocity (m/s)
    pub lead_in: f64, // Quiescent time before the gust (s)
    pub active: f64,  // Active gust duration (s)
    pub settle: f64,  // Quiescent time after the gust (s)
}

impl Gust {
    /// Derive the active-phase duration from a gradient length in chords:
    /// `active = gradient_chords * chord / v_inf`.
    pub fn from_gradient_length(
        peak: f64,
        gradient_chords: f64,
        chord: f64,
        v_inf: f64,
        lead_in: f64,
        settle: f64,
    ) -> Self {
        Gust {
            peak,
            lead_in,
            active: gradient_chords * chord / v_inf,
            settle,
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.lead_in + self.active + self.settle
    }

    /// Vertical gust velocity at elapsed time `t`: zero outside the active
    /// phase, a smooth cosine ramp inside. The ramp is exactly zero at both
    /// phase endpoints and reaches `peak` at the phase midpoint.
    pub fn velocity(&self, t: f64) -> f64 {
        if t < self.lead_in || t > self.lead_in + self.active {
            return 0.;
        }
        0.5 * self.peak * (1. - (2. * PI * (t - self.lead_in) / self.active).cos())
    }
}

//------------------------------------------------------------------------------
// Flow condition
//------------------------------------------------------------------------------

/// Freestream definition for a run: speed, angle of attack, air density, and
/// an optional time-dependent vertical gust.
#[derive(Debug, Clone)]
pub struct FlowCondition {
    pub v_inf: f64,   // Freestream velocity magnitude (m/s)
    pub aoa_deg: f64, // Angle of attack (degrees)
    pub density: f64, // Air density (kg/m^3)
    pub gust: Option<Gust>,
}

/// Per-instant flow sample handed to the aerodynamic solver. The gust is
/// sampled once per physical instant; the fixed-point loop sees a frozen
/// value.
#[derive(Debug, Clone, Copy)]
pub struct FlowState {
    pub velocity: [f64; 3], // Freestream velocity vector incl. gust (m/s)
    pub density: f64,       // Air density (kg/m^3)
}

impl FlowCondition {
    /// Sample the freestream velocity vector at physical time `t`:
    /// `[v_inf cos(aoa), 0, v_inf sin(aoa) + v_gust(t)]`.
    pub fn sample(&self, t: f64) -> FlowState {
        let aoa = self.aoa_deg.to_radians();
        let v_gust = self.gust.as_ref().map_or(0., |g| g.velocity(t));
        FlowState {
            velocity: [
                self.v_inf * aoa.cos(),
                0.,
                self.v_inf * aoa.sin() + v_gust,
            ],
            density: self.density,
        }
    }
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------
