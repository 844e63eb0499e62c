//! Simulator configuration: the gateway's settings plus the humidity
//! producer's threshold.

use gateway::GatewayConfig;
use sensor_node::NodeConfig;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub gateway: GatewayConfig,
    pub humidity_threshold: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            humidity_threshold: NodeConfig::default().humidity_threshold,
        }
    }
}

impl SimulatorConfig {
    pub fn from_env() -> Self {
        Self {
            gateway: GatewayConfig::from_env(),
            humidity_threshold: NodeConfig::from_env().humidity_threshold,
        }
    }

    /// All listeners on ephemeral loopback ports; producers follow the
    /// addresses the gateway actually bound.
    pub fn loopback_ephemeral() -> Self {
        Self {
            gateway: GatewayConfig::loopback_ephemeral(),
            ..Self::default()
        }
    }
}
