fn main() {
    carepilot_lib::run()
}
