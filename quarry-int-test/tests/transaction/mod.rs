mod store_fault_test;
mod unit_of_work_test;
