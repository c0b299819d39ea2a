// Tests for the gameflow orchestrator, driven through a mock LCU backend




#[cfg(test)]
mod test_orchestrator;
