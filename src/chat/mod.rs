pub mod agent_loop;
pub mod context;
pub mod thinking;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;
