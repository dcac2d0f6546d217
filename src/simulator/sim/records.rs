/// Push a ModelRecord stamped with the current simulation time
///
/// Usage:
/// ```ignore
/// model_record!(self, services, "phase", format!("{} -> {}", from, to));
/// ```
#[macro_export]
macro_rules! model_record {
  ($self:expr, $services:expr, $action:expr, $subject:expr) => {
    $self.records.push(sim::models::ModelRecord {
      time: $services.global_time(),
      action: $action.to_string(),
      subject: $subject.to_string(),
    });
  };
}
