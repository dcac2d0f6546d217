pub mod port;

pub use port::Wire;

/// A clocked component. `run` evaluates one cycle from the values currently
/// on the input wires and drives the output wires; the owner moves outputs
/// onto the next component's inputs after every component has run.
pub trait Module {
  fn run(&mut self);
  fn reset(&mut self);
  fn name(&self) -> &str;
}
