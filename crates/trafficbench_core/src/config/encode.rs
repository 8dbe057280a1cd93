//! Config → command-line token encoding.

use std::fmt::Display;
use std::path::Path;

use super::SimulationConfig;

/// Encode a configuration into ordered `--flag value` tokens.
///
/// Unset fields are skipped. Sequence parameters are flattened into a single
/// `;`-joined value token. No range validation happens here.
#[must_use]
pub fn encode(config: &SimulationConfig) -> Vec<String> {
    let mut tokens = Tokens::default();

    tokens.scalar("rounds", config.rounds.as_ref());
    tokens.scalar("length", config.length.as_ref());
    tokens.scalar("max_speed", config.max_speed.as_ref());
    tokens.scalar("lanes", config.lanes.as_ref());
    tokens.list("vehicles", config.vehicles.as_deref());
    tokens.scalar("place_car_probability", config.place_car_probability.as_ref());
    tokens.scalar("traffic_density", config.traffic_density.as_ref());
    tokens.scalar(
        "dilly_dally_probability",
        config.dilly_dally_probability.as_ref(),
    );
    tokens.scalar(
        "stay_in_lane_probability",
        config.stay_in_lane_probability.as_ref(),
    );
    tokens.scalar(
        "spawn_car_at_entrance_probability",
        config.spawn_car_at_entrance_probability.as_ref(),
    );
    tokens.scalar(
        "remove_car_on_exit_probability",
        config.remove_car_on_exit_probability.as_ref(),
    );
    tokens.list("monitor", config.monitor.as_deref());
    tokens.scalar("verbose", config.verbose.as_ref());
    tokens.path("image", config.image.as_deref());
    tokens.path("out_path", config.out_path.as_deref());

    tokens.0
}

/// `rounds` → `--rounds`, `max_speed` → `--max-speed`
fn flag(name: &str) -> String {
    format!("--{}", name.replace('_', "-"))
}

#[derive(Default)]
struct Tokens(Vec<String>);

impl Tokens {
    fn push(&mut self, name: &str, value: String) {
        self.0.push(flag(name));
        self.0.push(value);
    }

    fn scalar<T: Display>(&mut self, name: &str, value: Option<&T>) {
        if let Some(value) = value {
            self.push(name, value.to_string());
        }
    }

    fn list<T: Display>(&mut self, name: &str, values: Option<&[T]>) {
        if let Some(values) = values {
            let joined = values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";");
            self.push(name, joined);
        }
    }

    fn path(&mut self, name: &str, value: Option<&Path>) {
        if let Some(path) = value {
            self.push(name, path.display().to_string());
        }
    }
}
