fn main() {
    pixelpilot_lib::run()
}
