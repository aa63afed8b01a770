pub mod attendance_run;
