mod calendar;
mod modification;
mod review;
mod slots;
