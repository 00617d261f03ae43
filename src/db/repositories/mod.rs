mod batches;
mod cards;
mod observations;
