pub mod flux;
pub mod kubeconfig;
pub mod kubectl;
pub mod process;
