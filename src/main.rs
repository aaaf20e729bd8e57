fn main() {
    sensor_frames::cli::run();
}
