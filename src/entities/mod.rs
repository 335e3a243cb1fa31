//! Floor entities and the job lifecycle policy.

pub mod lifecycle;
pub mod model;

pub use model::{
    Availability, Job, JobPatch, JobStatus, Machine, MachinePatch, MachineStatus, NewJob,
    NewMachine, NewWorker, Priority, SortKey, Worker, WorkerPatch,
};
