pub mod edge_gate;

pub use edge_gate::{edge_gate_middleware, EdgeGate, USER_ID_HEADER};
