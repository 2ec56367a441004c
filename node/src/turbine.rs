//! turbine.rs — wind-turbine power estimator
//!
//! Shared by both ends of the pipe: the wind farm uses it to derive each
//! turbine's reported output from local weather, and the ground station
//! re-runs it on the delivered readings to flag records whose reported
//! power diverges from what the weather supports.

/// SWT-6.0-154 class machine.
#[derive(Debug, Clone)]
pub struct WindTurbineCalculator {
    /// Rated power, kW
    rated_power: f64,
    /// Cut-in wind speed, m/s
    cut_in_speed: f64,
    /// Rated wind speed, m/s
    rated_speed: f64,
    /// Cut-out wind speed, m/s
    cut_out_speed: f64,
}

impl Default for WindTurbineCalculator {
    fn default() -> Self {
        Self { rated_power: 6000.0, cut_in_speed: 4.0, rated_speed: 13.0, cut_out_speed: 25.0 }
    }
}

impl WindTurbineCalculator {
    /// Air density from the ideal gas law, kg/m³.
    pub fn air_density(&self, temperature_c: f64, pressure_pa: f64) -> f64 {
        const R_DRY_AIR: f64 = 287.05; // J/(kg·K)
        pressure_pa / (R_DRY_AIR * (temperature_c + 273.15))
    }

    /// Turbine power curve at standard air density, kW.
    fn power_curve(&self, wind_speed: f64) -> f64 {
        if wind_speed < self.cut_in_speed {
            0.0
        } else if wind_speed < 5.0 {
            // Linear ramp from cut-in to 5 m/s
            self.rated_power * 0.2 * (wind_speed - self.cut_in_speed) / (5.0 - self.cut_in_speed)
        } else if wind_speed < 10.0 {
            // Quadratic region 5–10 m/s
            let fraction = (wind_speed - 5.0) / 5.0;
            self.rated_power * (0.2 + 0.6 * fraction.powi(2))
        } else if wind_speed < self.rated_speed {
            // Near-linear climb to rated power
            self.rated_power * (0.8 + 0.2 * (wind_speed - 10.0) / (self.rated_speed - 10.0))
        } else if wind_speed <= self.cut_out_speed {
            self.rated_power
        } else {
            0.0
        }
    }

    /// Estimated electrical output in kW for the given local conditions.
    pub fn estimate_power_output(
        &self,
        wind_speed: f64,
        temperature_c: f64,
        pressure_pa: f64,
    ) -> f64 {
        if wind_speed < self.cut_in_speed || wind_speed > self.cut_out_speed {
            return 0.0;
        }
        let density_ratio = self.air_density(temperature_c, pressure_pa) / 1.225;
        // 0.95: mechanical → electrical conversion
        self.power_curve(wind_speed) * 0.95 * density_ratio
    }
}
