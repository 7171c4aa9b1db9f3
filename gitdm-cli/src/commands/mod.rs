pub mod check;
pub mod flow;
pub mod normalize;
pub mod serve;
