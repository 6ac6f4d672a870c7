//! Integration flows across the cluster view and the control manager.

#[cfg(test)]
mod cluster_flows;
#[cfg(test)]
mod restart_flows;
